// VideoSource implementations

pub mod ytdlp;

pub use ytdlp::YtDlpSource;
