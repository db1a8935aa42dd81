// Repository implementations (data access layer)
// Adapters that implement domain repository interfaces

pub mod in_memory_league_repository;
pub mod postgres_league_repository;

pub use in_memory_league_repository::InMemoryLeagueRepository;
pub use postgres_league_repository::PostgresLeagueRepository;
