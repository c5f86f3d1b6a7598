pub mod constants;
pub mod field;
pub mod fit_state;
pub mod helix;
pub mod hit;
pub mod kinfit_errors;
pub mod material;
pub mod prior_hit;
pub mod space_point_hit;
pub mod time_range;
