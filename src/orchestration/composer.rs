// Prompt composer - turns the user's prompt into the text sent for generation

/// Appended to every prompt
pub const STYLE_SUFFIX: &str = ", anime style, 2d, high quality";

/// Appended after the style suffix when a reference image is set
pub const REFERENCE_SUFFIX: &str = ", similar to reference image";

/// Build the final generation prompt.
///
/// The reference image only biases generation through this phrasing; it is
/// never sent to the image service itself.
pub fn compose(user_prompt: &str, has_reference: bool) -> String {
    let mut prompt =
        String::with_capacity(user_prompt.len() + STYLE_SUFFIX.len() + REFERENCE_SUFFIX.len());
    prompt.push_str(user_prompt);
    prompt.push_str(STYLE_SUFFIX);
    if has_reference {
        prompt.push_str(REFERENCE_SUFFIX);
    }
    prompt
}
