pub mod diff;
pub mod render;
pub mod run;
pub mod show;
