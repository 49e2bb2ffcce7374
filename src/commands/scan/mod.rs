mod checkpoint;
mod parameters;
mod report;
mod retrieval;
mod run;
mod validator;

pub use run::run;
pub(crate) use checkpoint::read_checkpoint;

use checkpoint::*;
use parameters::*;
use report::*;
use retrieval::*;
use validator::*;
