pub mod dataset;
pub mod loaders;
pub mod question;
pub mod scope;
pub mod test_record;

pub use dataset::{ImportDataset, ScopedDataset, TestEntry};
pub use loaders::load_dataset;
pub use question::{
    Ciphertext, EncryptedQuestion, ImportItem, PlainQuestion, QuestionContent, QuestionRecord,
    TextFields,
};
pub use scope::ImportScope;
pub use test_record::{TestCatalog, TestRecord};
