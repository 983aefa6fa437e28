pub mod coord_index;
pub mod river;
pub mod tracer;
