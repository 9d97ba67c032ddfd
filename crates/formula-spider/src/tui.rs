use crate::stock::yahoo_finance::Progress;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

const BAR_WIDTH: usize = 48;

/// The bars of a batch, top to bottom.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lane {
    Tickers,
    Collected,
    Failed,
}

impl Lane {
    fn label(self) -> &'static str {
        match self {
            Lane::Tickers => "tickers",
            Lane::Collected => "collected",
            Lane::Failed => "failed",
        }
    }

    fn template(self) -> String {
        match self {
            Lane::Tickers => format!(
                "{{spinner:.cyan}} {{msg:>9.bold}} [{{bar:{BAR_WIDTH}.cyan/blue}}] \
                 {{pos:>4}}/{{len:<4}} {{percent:>3}}% elapsed {{elapsed_precise}}, eta {{eta}}"
            ),
            Lane::Collected => {
                format!("  {{msg:>9.green}} [{{bar:{BAR_WIDTH}.green}}] {{pos:>4.green}}")
            }
            Lane::Failed => format!("  {{msg:>9.red}} [{{bar:{BAR_WIDTH}.red}}] {{pos:>4.red}}"),
        }
    }

    fn bar(self, len: usize) -> anyhow::Result<ProgressBar> {
        let style = ProgressStyle::with_template(&self.template())?.progress_chars("=> ");
        Ok(ProgressBar::new(len as u64)
            .with_style(style)
            .with_message(self.label()))
    }
}

/// Progress bars for a batch of `len` tickers, drawn to stderr.
pub fn multi_progress(len: usize) -> anyhow::Result<(MultiProgress, Progress)> {
    multi_progress_to(ProgressDrawTarget::stderr(), len)
}

fn multi_progress_to(
    target: ProgressDrawTarget,
    len: usize,
) -> anyhow::Result<(MultiProgress, Progress)> {
    let multi = MultiProgress::with_draw_target(target);

    let total = multi.add(Lane::Tickers.bar(len)?);
    total.enable_steady_tick(Duration::from_millis(120));
    let success = multi.add(Lane::Collected.bar(len)?);
    let fails = multi.add(Lane::Failed.bar(len)?);

    Ok((
        multi,
        Progress {
            total,
            success,
            fails,
        },
    ))
}

/// Clear the bars once the batch is done.
pub fn finish(progress: &Progress) {
    for bar in [&progress.total, &progress.success, &progress.fails] {
        bar.finish_and_clear();
    }
}
