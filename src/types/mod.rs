pub mod observation;
pub mod observation_value;
pub mod station;
