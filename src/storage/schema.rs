//! Database schema definitions
//!
//! Column names are the contract with existing databases and keep their
//! original (French) spelling.

/// SQL to create the sequences table backing named key sequences
pub const CREATE_SEQUENCES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS SEQUENCES (
    name TEXT PRIMARY KEY,
    next_value INTEGER NOT NULL DEFAULT 0
)
"#;

/// SQL to create the cities table
pub const CREATE_VILLES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS VILLES (
    numero INTEGER PRIMARY KEY,
    code_postal TEXT NOT NULL,
    nom_ville TEXT NOT NULL
)
"#;

/// SQL to create the restaurant types table
pub const CREATE_TYPES_GASTRONOMIQUES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS TYPES_GASTRONOMIQUES (
    numero INTEGER PRIMARY KEY,
    libelle TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL
)
"#;

/// SQL to create the restaurants table
pub const CREATE_RESTAURANTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS RESTAURANTS (
    numero INTEGER PRIMARY KEY,
    nom TEXT NOT NULL,
    description TEXT,
    site_web TEXT,
    adresse TEXT NOT NULL,
    fk_type INTEGER NOT NULL REFERENCES TYPES_GASTRONOMIQUES(numero),
    fk_vill INTEGER NOT NULL REFERENCES VILLES(numero)
)
"#;

/// SQL to create the likes table
/// Keys are generated by the database, not by a sequence
pub const CREATE_LIKES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS LIKES (
    numero INTEGER PRIMARY KEY AUTOINCREMENT,
    date_eval TEXT NOT NULL,
    appreciation TEXT NOT NULL CHECK (appreciation IN ('Y', 'N')),
    adresse_ip TEXT NOT NULL,
    fk_rest INTEGER NOT NULL REFERENCES RESTAURANTS(numero)
)
"#;

/// SQL to create the comments table
pub const CREATE_COMMENTAIRES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS COMMENTAIRES (
    numero INTEGER PRIMARY KEY,
    date_eval TEXT NOT NULL,
    commentaire TEXT NOT NULL,
    nom_utilisateur TEXT NOT NULL,
    fk_rest INTEGER NOT NULL REFERENCES RESTAURANTS(numero)
)
"#;

/// SQL to create the evaluation criteria table
pub const CREATE_CRITERES_EVALUATION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS CRITERES_EVALUATION (
    numero INTEGER PRIMARY KEY,
    nom TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL
)
"#;

/// SQL to create the grades table
pub const CREATE_NOTES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS NOTES (
    numero INTEGER PRIMARY KEY,
    note INTEGER NOT NULL,
    fk_comment INTEGER NOT NULL REFERENCES COMMENTAIRES(numero),
    fk_crit INTEGER NOT NULL REFERENCES CRITERES_EVALUATION(numero)
)
"#;

/// Named sequences, one per table that does not generate its own keys
pub const SEQUENCES: &[&str] = &[
    "SEQ_VILLES",
    "SEQ_TYPES_GASTRONOMIQUES",
    "SEQ_RESTAURANTS",
    "SEQ_COMMENTAIRES",
    "SEQ_NOTES",
    "SEQ_CRITERES_EVALUATION",
];

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_restaurants_type ON RESTAURANTS(fk_type)",
    "CREATE INDEX IF NOT EXISTS idx_restaurants_ville ON RESTAURANTS(fk_vill)",
    "CREATE INDEX IF NOT EXISTS idx_likes_rest ON LIKES(fk_rest)",
    "CREATE INDEX IF NOT EXISTS idx_commentaires_rest ON COMMENTAIRES(fk_rest)",
    "CREATE INDEX IF NOT EXISTS idx_notes_comment ON NOTES(fk_comment)",
    "CREATE INDEX IF NOT EXISTS idx_notes_crit ON NOTES(fk_crit)",
];

/// Tables in the order they can safely be counted or cleared (children first)
pub const TABLES: &[&str] = &[
    "NOTES",
    "COMMENTAIRES",
    "LIKES",
    "RESTAURANTS",
    "CRITERES_EVALUATION",
    "TYPES_GASTRONOMIQUES",
    "VILLES",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_SEQUENCES_TABLE,
        CREATE_VILLES_TABLE,
        CREATE_TYPES_GASTRONOMIQUES_TABLE,
        CREATE_RESTAURANTS_TABLE,
        CREATE_LIKES_TABLE,
        CREATE_COMMENTAIRES_TABLE,
        CREATE_CRITERES_EVALUATION_TABLE,
        CREATE_NOTES_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
