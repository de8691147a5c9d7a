pub struct Prompts;

impl Prompts {
    pub const HAZARD_IDENTIFICATION: &'static str = "You are a waste recognition AI. A user uploaded an image of an electronic item. \nFirst, try to identify what object is in the image (e.g., mobile phone, battery, laptop, etc.). \nThen explain the potential e-waste hazards of this item. Return the answer in this format:\n\nRecognized Item: <what it is>\nHazards:\n- <hazard 1>\n- <hazard 2>\n- ...";

    pub const ASSISTANT_PREAMBLE: &'static str =
        "You are a helpful assistant for e-waste recycling.";

    /// Transcript text standing in for an uploaded image.
    pub const IMAGE_UPLOADED: &'static str = "[Image uploaded]";
}
