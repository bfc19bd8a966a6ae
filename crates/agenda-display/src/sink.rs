//! Rendering sink interface.

use agenda_calendar::Event;

use crate::error::RenderError;

/// Consumer of the ordered event list.
///
/// `load_stylesheet` is called once at startup, before the first render.
/// `render` receives the full list in display order and must not assume it
/// changed since the previous call.
///
/// Both methods run synchronously on the scheduler task. Sinks do one short
/// write per call; anything slower belongs behind `spawn_blocking`.
pub trait RenderSink: Send {
    fn load_stylesheet(&mut self, css: &str) -> Result<(), RenderError> {
        let _ = css;
        Ok(())
    }

    fn render(&mut self, events: &[Event]) -> Result<(), RenderError>;
}

impl<S: RenderSink + ?Sized> RenderSink for Box<S> {
    fn load_stylesheet(&mut self, css: &str) -> Result<(), RenderError> {
        (**self).load_stylesheet(css)
    }

    fn render(&mut self, events: &[Event]) -> Result<(), RenderError> {
        (**self).render(events)
    }
}
