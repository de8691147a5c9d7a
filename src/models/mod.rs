pub mod upload;
pub mod user;

pub use upload::{NewUpload, Upload, UploadStatus};
pub use user::User;
