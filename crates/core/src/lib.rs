//! Live face analytics: capture frames, locate faces with a Haar cascade,
//! estimate age and gender per face, and present annotated frames.

pub mod shared {
    pub mod bounding_box;
    pub mod constants;
    pub mod error;
    pub mod frame;
    pub mod model_resolver;
}

pub mod capture {
    pub mod domain {
        pub mod capture_config;
        pub mod frame_source;
    }
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod face_detector;
        pub mod face_region;
        pub mod haar_cascade;
        pub mod integral_image;
    }
    pub mod infrastructure;
}

pub mod classification {
    pub mod domain {
        pub mod age_classifier;
        pub mod classification;
        pub mod gender_classifier;
    }
    pub mod infrastructure;
}

pub mod rendering {
    pub mod annotated_frame;
    pub mod annotation_renderer;
}

pub mod display {
    pub mod domain {
        pub mod display_sink;
    }
    pub mod infrastructure;
}

pub mod events {
    pub mod domain {
        pub mod detection_event;
        pub mod event_sink;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod face_classification;
    pub mod frame_cycle;
    mod output_channels;
    pub mod pipeline_controller;
    pub mod pipeline_logger;
    pub mod pipeline_state;
    pub mod pipeline_stats;
}
