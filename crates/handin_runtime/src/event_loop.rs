//! Generic screen loop: one update thread owning the model, one
//! effect thread running the handler. Events apply strictly in
//! arrival order, so an update function never runs concurrently with
//! itself for a given screen.

use std::sync::mpsc;
use std::thread;

/// Channel end handlers use to feed events back into the loop.
pub type EventSender<E> = mpsc::Sender<E>;

/// Executes the effects a screen's update function emits. Handlers
/// never touch the model; anything they learn comes back as an event
/// through the sender handed to the factory.
pub trait EffectHandler<F>: Send {
    fn accept(&self, effect: F);
}

/// Handle onto a running screen loop.
pub struct ScreenLoop<E> {
    event_tx: mpsc::Sender<E>,
}

impl<E> ScreenLoop<E> {
    pub fn dispatch(&self, event: E) {
        let _ = self.event_tx.send(event);
    }

    /// A sender for wiring further event sources to this loop.
    pub fn sender(&self) -> EventSender<E> {
        self.event_tx.clone()
    }
}

/// Starts a screen loop. `render` runs on the update thread after init
/// and after every applied event, with the fresh model snapshot;
/// effects run on their own thread in emission order.
pub fn spawn<M, E, F, H, HF, R>(
    model: M,
    init: fn(M) -> (M, Vec<F>),
    update: fn(M, E) -> (M, Vec<F>),
    handler_factory: HF,
    render: R,
) -> ScreenLoop<E>
where
    M: Send + 'static,
    E: Send + 'static,
    F: Send + 'static,
    H: EffectHandler<F> + 'static,
    HF: FnOnce(EventSender<E>) -> H,
    R: Fn(&M) + Send + 'static,
{
    let (event_tx, event_rx) = mpsc::channel::<E>();
    let (effect_tx, effect_rx) = mpsc::channel::<F>();

    let handler = handler_factory(event_tx.clone());
    thread::spawn(move || {
        while let Ok(effect) = effect_rx.recv() {
            handler.accept(effect);
        }
    });

    thread::spawn(move || {
        let (mut current, effects) = init(model);
        render(&current);
        for effect in effects {
            if effect_tx.send(effect).is_err() {
                return;
            }
        }
        while let Ok(event) = event_rx.recv() {
            let (next, effects) = update(current, event);
            current = next;
            render(&current);
            for effect in effects {
                if effect_tx.send(effect).is_err() {
                    return;
                }
            }
        }
    });

    ScreenLoop { event_tx }
}
