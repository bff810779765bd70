pub mod relay_pair;
