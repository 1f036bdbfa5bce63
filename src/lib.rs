/// Functionality related to the regexp engine's linear bytecode.
/// This includes the opcode tables (byte tags and instruction
/// widths), the typed instruction representation, the decoder which
/// turns a packed byte buffer into an instruction stream, and a
/// pretty printer for disassembly listings.
pub mod bytecode;
/// Static analyses over a decoded instruction stream.  This includes
/// decomposition into basic blocks, the failing-block closure, and
/// the merge pass which produces _extended_ basic blocks by absorbing
/// fall-through regions that lead only to match-failure.
pub mod analysis;
/// The dynamic half of the toolkit: clients for the external cost
/// samplers, the pumper which searches a witness string for
/// super-linear growth sites, the growth-curve classifier, and the
/// per-core worker pool which drives many witnesses in parallel.
pub mod pump;
