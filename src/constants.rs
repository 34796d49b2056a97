/// EAR 分母保护项，避免眼角距离接近 0 时除零
pub const EAR_EPSILON: f64 = 1e-6;

/// 置信度分母保护项
pub const AREA_EPSILON: f64 = 1e-6;

/// 默认 EAR 通道 EMA 平滑系数
pub const DEFAULT_EAR_EMA_ALPHA: f64 = 0.3;

/// 默认对视通道 EMA 平滑系数
pub const DEFAULT_CONTACT_EMA_ALPHA: f64 = 0.2;

/// 平滑 EAR 低于此值视为眨眼
pub const DEFAULT_EAR_BLINK_THRESHOLD: f64 = 0.21;

/// 瞳孔检测最低置信度
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.15;

/// 视线偏移模长超过此值视为移开视线
pub const DEFAULT_GAZE_MAGNITUDE_THRESHOLD: f64 = 0.55;

/// 平滑后的对视指标高于此值时上报 eyeContact
pub const SMOOTHED_CONTACT_CUTOFF: f64 = 0.5;

/// 瞳孔裁剪区域高斯模糊 sigma（等效 OpenCV 5x5 核的默认 sigma）
pub const PUPIL_BLUR_SIGMA: f32 = 1.1;

/// 68 点人脸关键点布局中左眼的索引范围
pub const LEFT_EYE_RANGE: std::ops::Range<usize> = 36..42;

/// 68 点人脸关键点布局中右眼的索引范围
pub const RIGHT_EYE_RANGE: std::ops::Range<usize> = 42..48;

/// 完整人脸关键点数量
pub const FACE_LANDMARK_COUNT: usize = 68;

/// 默认人脸区域最低亮度标准差（低于此值视为遮挡/黑屏）
pub const DEFAULT_MIN_FACE_CONTRAST: f64 = 24.0;

/// 默认最大并发会话数
pub const DEFAULT_MAX_SESSIONS: usize = 64;

/// 单会话待处理帧队列深度
pub const DEFAULT_SESSION_QUEUE_DEPTH: usize = 4;
