pub mod conversation;
pub mod decision;
pub mod draft;
pub mod run;
