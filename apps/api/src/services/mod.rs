// Application services
// Orchestrate domain rules, the league store, and real-time fan-out

pub mod league_service;

pub use league_service::LeagueService;
