pub mod position_range;
