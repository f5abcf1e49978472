pub const AGE_MODEL_NAME: &str = "age_googlenet.onnx";
pub const AGE_MODEL_URL: &str =
    "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/age_gender/models/age_googlenet.onnx";

pub const GENDER_MODEL_NAME: &str = "gender_googlenet.onnx";
pub const GENDER_MODEL_URL: &str =
    "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/age_gender/models/gender_googlenet.onnx";

/// OpenCV's stock frontal-face cascade, used when none is configured.
pub const CASCADE_MODEL_NAME: &str = "haarcascade_frontalface_alt.xml";
pub const CASCADE_MODEL_URL: &str =
    "https://raw.githubusercontent.com/opencv/opencv/4.x/data/haarcascades/haarcascade_frontalface_alt.xml";

pub const DEFAULT_CAPTURE_DEVICE: &str = "/dev/video0";
pub const DEFAULT_CAPTURE_FORMAT: &str = "video4linux2";
pub const DEFAULT_FRAME_WIDTH: u32 = 680;
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;
pub const DEFAULT_FPS: u32 = 30;

/// Largest age-range midpoint still bucketed as "Child".
pub const CHILD_MAX_MIDPOINT: i64 = 14;

/// Caption anchor offset, up and left of the face box.
pub const CAPTION_OFFSET: i32 = 10;

/// Timestamp layout handed to the persistence collaborator.
pub const EVENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
