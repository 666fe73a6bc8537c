use colored::Color;
use std::fmt;
use std::fmt::Write;
use std::fmt::{Debug, Display};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::registry::LookupSpan;

pub(super) struct Formatter {
    use_colors: bool,
}

impl Formatter {
    pub(super) fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }
}

/// Trace id and the remaining span fields, outermost span first.
#[derive(Default)]
struct SpanContext {
    trace_id: Option<String>,
    fields: Vec<String>,
}

impl Display for SpanContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(trace_id) = &self.trace_id {
            write!(f, "@{trace_id}")?;
        }
        if !self.fields.is_empty() {
            write!(f, "{{{}}}", self.fields.join(" "))?;
        }
        Ok(())
    }
}

fn span_context<S, N>(ctx: &FmtContext<'_, S, N>) -> SpanContext
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    let mut context = SpanContext::default();
    let Some(scope) = ctx.event_scope() else {
        return context;
    };
    for span in scope.from_root() {
        let extensions = span.extensions();
        let Some(fields) = extensions.get::<FormattedFields<N>>() else {
            continue;
        };
        if fields.is_empty() {
            continue;
        }
        match fields.strip_prefix("trace_id=") {
            Some(trace_id) => context.trace_id = Some(trace_id.to_string()),
            None => context.fields.push(fields.to_string()),
        }
    }
    context
}

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let time = chrono::Local::now().format("%H:%M:%S%.3f");
        let mut visitor = StringVisitor::new();
        event.record(&mut visitor);
        let message = visitor.message.trim_end();
        let origin = format!("{}{}:", short_target(meta.target()), span_context(ctx));
        let level = LogLevelFormat::new(meta.level(), self.use_colors);
        if self.use_colors {
            write!(
                writer,
                "[{} {level}] {} {message}",
                ColoredText::bright_black(time),
                ColoredText::bright_black(origin),
            )?;
        } else {
            write!(writer, "[{time} {level}] {origin} {message}")?;
        }
        writeln!(writer)
    }
}

/// Crate module paths lose the crate name: `fleetview::fleet::poller` is
/// written `fv::fleet::poller`.
fn short_target(target: &str) -> std::borrow::Cow<'_, str> {
    match target.strip_prefix("fleetview") {
        Some(rest) if rest.is_empty() || rest.starts_with("::") => format!("fv{rest}").into(),
        _ => target.into(),
    }
}

/// Collects the `message` field as is and every other field as `name=value`.
struct StringVisitor {
    message: String,
}

impl StringVisitor {
    fn new() -> Self {
        Self {
            message: String::new(),
        }
    }
}

impl Visit for StringVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            write!(self.message, "{value} ").ok();
        } else {
            write!(self.message, "{}={value} ", field.name()).ok();
        }
    }
    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        if field.name() == "message" {
            write!(self.message, "{value:?} ").ok();
        } else {
            write!(self.message, "{}={value:?} ", field.name()).ok();
        }
    }
}

struct LogLevelFormat {
    label: &'static str,
    color: Option<Color>,
}

impl LogLevelFormat {
    fn new(level: &Level, use_colors: bool) -> Self {
        let (label, color) = match *level {
            Level::ERROR => ("ERR", Color::BrightRed),
            Level::WARN => ("WRN", Color::BrightYellow),
            Level::INFO => ("INF", Color::BrightBlue),
            Level::DEBUG => ("DBG", Color::BrightMagenta),
            Level::TRACE => ("TRC", Color::BrightWhite),
        };
        Self {
            label,
            color: use_colors.then_some(color),
        }
    }
}

impl Display for LogLevelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(color) = self.color {
            write!(f, "\x1B[{}m", color.to_fg_str())?;
            write!(f, "{}", self.label)?;
            write!(f, "\x1B[0m")?;
        } else {
            write!(f, "{}", self.label)?;
        }
        Ok(())
    }
}

struct ColoredText<T> {
    content: T,
    color: Color,
}
impl<T> ColoredText<T> {
    fn bright_black(value: T) -> ColoredText<T> {
        ColoredText {
            content: value,
            color: Color::BrightBlack,
        }
    }
}
impl<T: Display> Display for ColoredText<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x1B[{}m", self.color.to_fg_str())?;
        write!(f, "{}", self.content)?;
        write!(f, "\x1B[0m")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn shortens_crate_targets() {
        assert_eq!(short_target("fleetview"), "fv");
        assert_eq!(short_target("fleetview::fleet::poller"), "fv::fleet::poller");
        assert_eq!(short_target("tower_http::trace"), "tower_http::trace");
    }

    #[test]
    fn plain_line_layout() {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .event_format(Formatter::new(false))
                .with_writer(move || writer.clone()),
        );
        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::debug_span!("request", trace_id = %"abc");
            let _guard = span.enter();
            tracing::warn!(attempt = 2, "fleet fetch failed");
        });
        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let line = output.lines().next().unwrap();
        // [HH:MM:SS.mmm WRN] target@trace: message
        assert_eq!(&line[13..18], " WRN]", "{line}");
        assert!(line.contains("@abc: "), "{line}");
        assert!(line.contains("fleet fetch failed"), "{line}");
        assert!(line.contains("attempt=2"), "{line}");
    }
}
