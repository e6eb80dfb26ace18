use flexi_logger::{
    FlexiLoggerError
    , Logger
    , LoggerHandle
};

pub fn init_logging(level: &str) -> Result<LoggerHandle, FlexiLoggerError> {
    Logger::try_with_env_or_str(level)?
        .format(flexi_logger::colored_detailed_format)
        .start()
}
