pub mod chart;
pub mod chart_menu;
pub mod devices;
pub mod summary;
