use std::fmt::Display;

pub const DEFAULT_WIDTH: u32 = 512;
pub const DEFAULT_HEIGHT: u32 = 512;
pub const DEFAULT_OUTPUT_PATH: &str = "shading_output.png";

pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub output_path: String,
}

pub struct RenderSettingsBuilder {
    width: u32,
    height: u32,
    output_path: String,
}

impl RenderSettingsBuilder {
    pub fn new() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            output_path: DEFAULT_OUTPUT_PATH.to_string(),
        }
    }

    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn output_path<T>(mut self, path: T) -> Self
    where
        T: Display,
    {
        self.output_path = path.to_string();
        self
    }

    pub fn build(self) -> RenderSettings {
        RenderSettings {
            width: self.width,
            height: self.height,
            output_path: self.output_path,
        }
    }
}

impl Default for RenderSettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let settings = RenderSettingsBuilder::new().build();
        assert_eq!(settings.width, DEFAULT_WIDTH);
        assert_eq!(settings.height, DEFAULT_HEIGHT);
        assert_eq!(settings.output_path, DEFAULT_OUTPUT_PATH);
    }

    #[test]
    fn overrides_replace_defaults() {
        let settings = RenderSettingsBuilder::new()
            .resolution(64, 32)
            .output_path("frame.png")
            .build();
        assert_eq!((settings.width, settings.height), (64, 32));
        assert_eq!(settings.output_path, "frame.png");
    }
}
