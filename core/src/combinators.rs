//! Combinators over several deferreds.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::deferred::{Deferred, Outcome};

/// Wait for every deferred in `deferreds` to settle.
///
/// The returned deferred always succeeds, with one outcome per input in input
/// order. Input failures are handed over to the combined result, so they are
/// not reported as unhandled by the inputs.
pub fn gather<T>(deferreds: Vec<Deferred<T>>) -> Deferred<Vec<Outcome<T>>>
where
    T: Clone + 'static,
{
    let combined = Deferred::new();
    if deferreds.is_empty() {
        combined.settle_or_log(Ok(Vec::new()));
        return combined;
    }

    let slots: Rc<RefCell<Vec<Option<Outcome<T>>>>> =
        Rc::new(RefCell::new(vec![None; deferreds.len()]));
    let remaining = Rc::new(Cell::new(deferreds.len()));

    for (index, deferred) in deferreds.into_iter().enumerate() {
        let slots = Rc::clone(&slots);
        let remaining = Rc::clone(&remaining);
        let combined = combined.clone();
        deferred.observe(move |outcome| {
            slots.borrow_mut()[index] = Some(outcome.clone());
            remaining.set(remaining.get() - 1);
            if remaining.get() == 0 {
                let outcomes = slots.borrow_mut().drain(..).flatten().collect();
                combined.settle_or_log(Ok(outcomes));
            }
        });
    }
    combined
}
