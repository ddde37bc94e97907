pub mod company_repository;
pub mod fundamental_repository;

// Re-export all repositories for convenient access
pub use company_repository::CompanyRepository;
pub use fundamental_repository::FundamentalRepository;
