pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{banner, section, success, summary_row};
pub use table::{restaurant_table, stats_table, RestaurantRow, TableBuilder};
pub use theme::{theme, Role, Theme};
