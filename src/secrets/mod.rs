mod credentials_file;

pub use credentials_file::CredentialStore;
