use tabled::{settings::Style, Table, Tabled};
use crate::domain::{Restaurant, Shared};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Table")]
    pub metric: String,
    #[tabled(rename = "Rows")]
    pub value: String,
}

pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn stats_table(stats: &[(&str, usize)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, &value.to_string());
    }
    builder.build()
}

/// One line of the restaurant listing
#[derive(Debug, Tabled, serde::Serialize)]
pub struct RestaurantRow {
    #[tabled(rename = "#")]
    pub id: i64,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "City")]
    pub city: String,
    #[tabled(rename = "Type")]
    pub kind: String,
    #[tabled(rename = "👍")]
    pub likes: usize,
    #[tabled(rename = "👎")]
    pub dislikes: usize,
    #[tabled(rename = "Reviews")]
    pub reviews: usize,
}

impl RestaurantRow {
    pub fn from_restaurant(restaurant: &Shared<Restaurant>) -> Self {
        let r = restaurant.read();
        let city = r.city().read();
        Self {
            id: r.id.unwrap_or_default(),
            name: r.name.clone(),
            city: format!("{} {}", city.zip_code, city.name),
            kind: r.restaurant_type.read().label.clone(),
            likes: r.likes(),
            dislikes: r.dislikes(),
            reviews: r.evaluations.iter().filter(|e| e.as_complete().is_some()).count(),
        }
    }
}

pub fn restaurant_table(rows: &[RestaurantRow]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_table_lists_every_row() {
        let table = stats_table(&[("VILLES", 2), ("RESTAURANTS", 5)]);
        assert!(table.contains("VILLES"));
        assert!(table.contains("RESTAURANTS"));
        assert!(table.contains('5'));
    }

    #[test]
    fn test_empty_tables_render_nothing() {
        assert!(stats_table(&[]).is_empty());
        assert!(restaurant_table(&[]).is_empty());
    }
}
