pub mod ashby;
pub mod ats;
pub mod cache;
pub mod content;
pub mod greenhouse;
pub mod lever;
pub mod llm;
pub mod salary;

pub use ats::AtsClient;
pub use cache::MokaAnswerCache;
pub use content::HtmlContentExtractor;
pub use llm::OpenAiAnswerer;
pub use salary::RegexSalaryExtractor;
