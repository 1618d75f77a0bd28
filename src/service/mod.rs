pub mod account_service;
pub mod classifier;
pub mod credit;
pub mod fetcher;
pub mod labels;
pub mod password;

pub use account_service::{AccountService, AuthenticatedAccount, Classification};
pub use classifier::{ImageClassifier, InferenceAdapter, ModelBackend, Prediction};
pub use credit::CreditReservation;
pub use fetcher::{HttpImageFetcher, ImageFetcher};
pub use labels::LabelSet;
pub use password::PasswordHashing;
