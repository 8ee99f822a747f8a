//! Passive effect flush.

use std::rc::Rc;

use tracing::{debug_span, trace};

use crate::root::RootCell;

/// Run the effects collected by earlier commits: every unmount cleanup,
/// then the cleanups of effects about to re-run, then their creates.
///
/// All destroys of the batch run before any create. Effects run with the
/// root released, so they may dispatch updates. Returns whether anything
/// was pending.
pub(crate) fn flush_passive_effects(cell: &Rc<RootCell>) -> bool {
    let pending = {
        let Ok(mut root) = cell.root.try_borrow_mut() else {
            return false;
        };
        root.passive_flush_scheduled = false;
        if root.pending_passive_effects.is_empty() {
            return false;
        }
        root.in_commit_callbacks = true;
        std::mem::take(&mut root.pending_passive_effects)
    };

    let span = debug_span!("flush_passive_effects");
    let _enter = span.enter();
    trace!(
        unmounted = pending.unmount.len(),
        updated = pending.update.len(),
        "running passive effects"
    );

    for effect in &pending.unmount {
        effect.run_destroy();
    }
    for list in &pending.update {
        for effect in list.iter().filter(|effect| effect.has_effect()) {
            effect.run_destroy();
        }
    }
    for list in &pending.update {
        for effect in list.iter().filter(|effect| effect.has_effect()) {
            effect.run_create();
        }
    }

    if let Ok(mut root) = cell.root.try_borrow_mut() {
        root.in_commit_callbacks = false;
    }
    drop(_enter);

    cell.reconciler.flush_sync_callbacks();
    true
}
