pub mod anki_connect;
pub mod json_store;
pub mod model_llm;

pub use anki_connect::AnkiConnectAdapter;
pub use json_store::JsonFileStore;
pub use model_llm::ChatCompletionAdapter;
