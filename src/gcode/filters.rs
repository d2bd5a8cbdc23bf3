//! Post-processing filter pipeline.
//!
//! Each layer's assembled text runs through the configured filters before
//! it is written out; cooling-rate adjustment and spiral-vase rewriting
//! plug in here. Composition order is fixed at construction - the engine
//! never reorders filters.

/// A post-filter rewriting already-generated instruction text.
pub trait GCodeFilter {
    /// Rewrite one layer's worth of G-code.
    fn filter(&mut self, gcode: &str) -> String;

    /// Emit any text the filter buffered past the last layer.
    fn flush(&mut self) -> String {
        String::new()
    }
}

/// An ordered chain of post-filters.
#[derive(Default)]
pub struct FilterPipeline {
    filters: Vec<Box<dyn GCodeFilter>>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter to the end of the chain.
    pub fn push(&mut self, filter: Box<dyn GCodeFilter>) {
        self.filters.push(filter);
    }

    /// Run a layer's text through every filter in order.
    pub fn apply(&mut self, gcode: &str) -> String {
        let mut text = gcode.to_string();
        for filter in &mut self.filters {
            text = filter.filter(&text);
        }
        text
    }

    /// Flush all filters in order.
    pub fn flush(&mut self) -> String {
        let mut out = String::new();
        for filter in &mut self.filters {
            out.push_str(&filter.flush());
        }
        out
    }
}

impl std::fmt::Debug for FilterPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FilterPipeline({} filters)", self.filters.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Uppercase;
    impl GCodeFilter for Uppercase {
        fn filter(&mut self, gcode: &str) -> String {
            gcode.to_uppercase()
        }
    }

    struct Suffix;
    impl GCodeFilter for Suffix {
        fn filter(&mut self, gcode: &str) -> String {
            format!("{gcode};f")
        }
        fn flush(&mut self) -> String {
            ";end".to_string()
        }
    }

    #[test]
    fn test_filters_compose_in_order() {
        let mut pipeline = FilterPipeline::new();
        pipeline.push(Box::new(Uppercase));
        pipeline.push(Box::new(Suffix));
        // uppercase runs first, so the suffix stays lowercase
        assert_eq!(pipeline.apply("g1 x0"), "G1 X0;f");
        assert_eq!(pipeline.flush(), ";end");
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let mut pipeline = FilterPipeline::new();
        assert_eq!(pipeline.apply("G1 X0\n"), "G1 X0\n");
        assert_eq!(pipeline.flush(), "");
    }
}
