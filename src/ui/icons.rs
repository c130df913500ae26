pub struct Icons;

impl Icons {
    pub const SEARCH: &str = "🔍";
    pub const CHECK: &str = "✅";
    pub const STATS: &str = "📊";
    pub const DATABASE: &str = "🗄️";
    pub const PERSON: &str = "👤";
    pub const STAR: &str = "⭐";
    pub const PLATE: &str = "🍽️";
    pub const PIN: &str = "📍";
}
