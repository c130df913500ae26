use std::path::{Path, PathBuf};
use std::sync::Arc;
use chrono::Local;
use restodir::config::{self, RestodirConfig};
use restodir::output::{emit_success, OutputMode};
use restodir::ui::{self, banner, section, success, summary_row, Icons, RestaurantRow};
use restodir::{
    shared, BasicEvaluation, City, CompleteEvaluation, ConnectionProvider, EvaluationCriteria,
    Localisation, Mapper, MapperRegistry, Restaurant, RestaurantType,
};

/// Where the config and the database live for this invocation
pub struct Settings {
    pub config_path: PathBuf,
    pub config: RestodirConfig,
    pub database: PathBuf,
}

impl Settings {
    pub fn resolve(config_path: Option<&Path>, database: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_path = config_path.map(Path::to_path_buf).unwrap_or_else(config::default_config_path);
        let config = config::load_config(Some(&config_path))?.unwrap_or_default();
        let database = match database {
            Some(path) => path,
            None => config.database_path(&std::env::current_dir()?),
        };
        Ok(Self {
            config_path,
            config,
            database,
        })
    }

    fn connect(&self) -> anyhow::Result<Arc<ConnectionProvider>> {
        config::ensure_db_dir(&self.database)?;
        let provider = ConnectionProvider::open(&self.database, &self.config.pool_settings())?;
        Ok(Arc::new(provider))
    }

    fn registry(&self) -> anyhow::Result<MapperRegistry> {
        Ok(MapperRegistry::new(self.connect()?))
    }
}

pub fn run_init(settings: &Settings, force: bool, output_mode: OutputMode) -> anyhow::Result<()> {
    let defaults = settings.config.pool_settings();
    let config = RestodirConfig {
        database: Some(settings.database.display().to_string()),
        pool_size: Some(defaults.max_size),
        connection_timeout_secs: Some(defaults.connection_timeout.as_secs()),
    };
    config::write_config(&settings.config_path, &config, force)?;
    let provider = settings.connect()?;

    if output_mode.is_human() {
        success(&format!("Wrote {}", settings.config_path.display()));
        summary_row(Icons::DATABASE, provider.location());
    } else {
        let data = serde_json::json!({
            "config": settings.config_path.display().to_string(),
            "database": provider.location(),
        });
        emit_success(output_mode, "init", data)?;
    }
    Ok(())
}

pub fn run_stats(settings: &Settings, output_mode: OutputMode) -> anyhow::Result<()> {
    let provider = settings.connect()?;
    let stats = provider.stats()?;

    if output_mode.is_human() {
        println!("{} Restodir Statistics ({})", Icons::STATS, provider.location());
        println!("{}", ui::stats_table(&stats.tables));
    } else {
        emit_success(output_mode, "stats", &stats)?;
    }
    Ok(())
}

pub fn run_restaurants(settings: &Settings, search: Option<&str>, output_mode: OutputMode) -> anyhow::Result<()> {
    let registry = settings.registry()?;
    let restaurants = match search {
        Some(fragment) => registry.restaurants.find_by_name_fragment(fragment)?,
        None => registry.restaurants.find_all()?,
    };
    let rows: Vec<RestaurantRow> = restaurants.iter().map(RestaurantRow::from_restaurant).collect();

    if output_mode.is_human() {
        if rows.is_empty() {
            println!("{} No restaurants found.", Icons::SEARCH);
        } else {
            println!("{}", ui::restaurant_table(&rows));
        }
    } else {
        emit_success(output_mode, "restaurants", &rows)?;
    }
    Ok(())
}

pub fn run_demo(settings: &Settings, keep: bool, output_mode: OutputMode) -> anyhow::Result<()> {
    let registry = settings.registry()?;
    let today = Local::now().date_naive();

    let city = registry.cities.create(&shared(City::new("2000", "Neuchâtel")))?;
    let kind = registry
        .types
        .create(&shared(RestaurantType::new("Pizzeria", "Pizzas au feu de bois")))?;
    let restaurant = registry.restaurants.create(&shared(Restaurant::new(
        "Da Mario",
        Some("Pizzeria familiale".to_string()),
        None,
        Localisation::new("Rue du Lac 1", city),
        kind,
    )))?;
    let service = registry
        .criteria
        .create(&shared(EvaluationCriteria::new("Service", "Accueil et service")))?;
    let cuisine = registry
        .criteria
        .create(&shared(EvaluationCriteria::new("Cuisine", "Qualité des plats")))?;

    for (like, ip) in [(true, "10.0.0.7"), (true, "10.0.0.8"), (false, "10.0.0.9")] {
        registry
            .basic_evaluations
            .create(&shared(BasicEvaluation::new(today, &restaurant, like, ip)))?;
    }
    let review = shared(CompleteEvaluation::new(today, &restaurant, "Excellente pâte", "bob"));
    CompleteEvaluation::add_grade(&review, &service, 4);
    CompleteEvaluation::add_grade(&review, &cuisine, 5);
    let review = registry.complete_evaluations.create(&review)?;

    // Read back through a fresh session to exercise hydration
    let id = restaurant.read().id.unwrap_or_default();
    let session = MapperRegistry::new(registry.db().clone());
    let loaded = session
        .restaurants
        .find_by_id(id)?
        .ok_or_else(|| anyhow::anyhow!("restaurant #{} vanished", id))?;
    let row = RestaurantRow::from_restaurant(&loaded);
    let average = review.read().average_grade();

    let deleted = if keep { false } else { registry.restaurants.delete(&restaurant)? };

    if output_mode.is_human() {
        banner(
            "Restodir demo",
            &format!("Database: {}", registry.db().location()),
        );
        println!("{}", ui::restaurant_table(std::slice::from_ref(&row)));
        section("Review");
        summary_row(Icons::PERSON, &review.read().username);
        summary_row(
            Icons::STAR,
            &average.map(|a| format!("{:.1}", a)).unwrap_or_else(|| "-".to_string()),
        );
        if deleted {
            success(&format!("Deleted restaurant #{} with all of its evaluations", id));
        } else {
            summary_row(Icons::PIN, &format!("Kept restaurant #{}", id));
        }
    } else {
        let data = serde_json::json!({
            "restaurant": row,
            "average_grade": average,
            "deleted": deleted,
        });
        emit_success(output_mode, "demo", data)?;
    }
    Ok(())
}
