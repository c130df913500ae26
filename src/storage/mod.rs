//! Storage Layer - pooled SQLite connections
//!
//! System of record is SQLite with tables:
//! - VILLES(numero, code_postal, nom_ville)
//! - TYPES_GASTRONOMIQUES(numero, libelle, description)
//! - RESTAURANTS(numero, nom, description, site_web, adresse, fk_type, fk_vill)
//! - LIKES(numero, date_eval, appreciation, adresse_ip, fk_rest)
//! - COMMENTAIRES(numero, date_eval, commentaire, nom_utilisateur, fk_rest)
//! - NOTES(numero, note, fk_comment, fk_crit)
//! - CRITERES_EVALUATION(numero, nom, description)
//! - SEQUENCES(name, next_value)

pub mod pool;
pub mod schema;
pub mod sequence;

pub use pool::{ConnectionProvider, DbStats, PoolSettings, PooledConnection};
pub use sequence::KeyStrategy;
