//! Notes: batches of stock-affecting lines.

mod ledger;
mod lines;
mod state;
mod validation;

pub use ledger::{NoteLedger, insert_reconciliation_note, next_note_id};
pub use lines::{
    CustomItem, NewCustomItem, Note, NoteEntry, NoteLine, NoteSummary, NoteUpdate, Receipt,
    ReceiptItem, TransactionUpdate, Volume,
};
pub use state::{NoteKind, NoteState};
pub use validation::{PendingLine, collect_violations};
