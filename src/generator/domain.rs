//! Problem domains a question can be generated for.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Ecommerce,
    VideoStreaming,
    Apple,
    Generic,
}

impl Domain {
    /// Context given to the model when asking for a question.
    pub fn description(&self) -> &'static str {
        match self {
            Domain::Ecommerce => "E-commerce systems like Amazon/eBay",
            Domain::VideoStreaming => "Video streaming platforms like Netflix",
            Domain::Apple => "Apple ecosystem services",
            Domain::Generic => "Generic system design problems",
        }
    }

    /// Directory name used for this domain's questions.
    pub fn slug(&self) -> &'static str {
        match self {
            Domain::Ecommerce => "ecommerce",
            Domain::VideoStreaming => "video_streaming",
            Domain::Apple => "apple",
            Domain::Generic => "generic",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}
