use crate::{args::Args, MainError};
use log::{warn, Level, LevelFilter};
use simplelog::{
    format_description, Color, ColorChoice, ConfigBuilder, LevelPadding, TermLogger, TerminalMode,
};

// ISO-8601 with the local offset, so it lines up with the playbook output
const TIMESTAMP_FORMAT_OFFSET: &[simplelog::FormatItem<'_>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3][offset_hour sign:mandatory]:[offset_minute]"
);

/// Quiet wins over verbose: only errors are printed then.
fn level_filter(quiet: bool, verbose: u8) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}

pub fn init_logger(args: &Args) -> Result<(), MainError> {
    let config = ConfigBuilder::new()
        .set_level_color(Level::Debug, Some(Color::Magenta))
        .set_level_color(Level::Trace, None)
        .set_level_padding(LevelPadding::Right)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .set_time_format_custom(TIMESTAMP_FORMAT_OFFSET)
        .set_time_offset_to_local()
        .map_err(|_| MainError::FailedLoggerTimezones)?
        .build();

    TermLogger::init(
        level_filter(args.quiet, args.verbose),
        config,
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    if args.verbose > 2 {
        warn!("Okay, it's time to stop. It won't get more verbose than this.")
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_log_info_by_default() {
        assert_eq!(LevelFilter::Info, level_filter(false, 0));
    }

    #[test]
    fn it_should_increase_verbosity() {
        assert_eq!(LevelFilter::Debug, level_filter(false, 1));
        assert_eq!(LevelFilter::Trace, level_filter(false, 2));
        assert_eq!(LevelFilter::Trace, level_filter(false, 5));
    }

    #[test]
    fn it_should_only_log_errors_when_quiet() {
        assert_eq!(LevelFilter::Error, level_filter(true, 2));
    }
}
