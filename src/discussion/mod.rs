//! The discussion protocol around the shared thread.
//!
//! - `CursorTracker`: delta of unseen comments, monotone watermark
//! - `CommentBatchParser` / `MentionExtractor`: self detection and structured references
//! - `ContextInvestigator`: local file and function lookups for mentions
//! - `ConsensusDetector`: forward-only agreement state machine
//! - `ResponseComposer`: signed outgoing messages
//! - `ReportGenerator`: end-of-session report and its sinks
//! - `DiscussionSession`: the driver tying it together

mod checkpoint;
mod composer;
mod consensus;
mod cursor;
mod investigator;
mod mentions;
mod parser;
mod report;
mod responder;
mod session;

pub use checkpoint::{CursorStore, SessionCheckpoint};
pub use composer::ResponseComposer;
pub use consensus::{ConsensusDetector, ConsensusSignal, ConsensusState, Transition};
pub use cursor::{Batch, Cursor, CursorTracker};
pub use investigator::{
    Context, ContextInvestigator, FileReader, GitGrepSearch, Investigation, RepoFiles,
    SymbolSearch,
};
pub use mentions::{Mention, MentionExtractor, MentionKind, Signature};
pub use parser::{CommentBatchParser, ParsedComment};
pub use report::{
    AuthorSection, Contribution, FileReportSink, Report, ReportGenerator, ReportSink, Statement,
    TerminationReason,
};
pub use responder::{CommandResponder, Phase, ResponseRequest, Responder, SilentResponder};
pub use session::{DiscussionSession, SessionOutcome, SessionPhase, SessionRequest};
