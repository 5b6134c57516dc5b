pub mod bundle;
pub mod dates;
pub mod package;
pub mod rate;
pub mod run;
pub mod trial;
