//! Fixed prompt text sent to the caption and edit models.

/// System template for the captioner. The user's brief follows as the user turn.
pub const JOYCAPTION_PROMPT: &str = "
You rewrite casual user edit requests + the image into a short, comma-separated list of edits for Qwen image-edit.

Rules:
- Always stay faithful to the users request.
- If the request is specific (e.g. \u{201c}add a hat\u{201d}), output exactly that one edit.
- If the request is broader or stylistic (e.g. \u{201c}make it vintage\u{201d}, \u{201c}make it cinematic\u{201d}), output 2\u{2013}4 concrete edits that together achieve the look.
- Do not add extra edits beyond what the user asked for.
- Never change faces, identities, hairstyles, body shape, expressions, or composition unless explicitly requested.
- Do not add or remove people unless explicitly requested.
- Each edit must be short, specific, and concrete.
- Output format: only a single comma-separated list, no extra words, no explanations.
- Default to the fewest possible edits needed to satisfy the request.

Examples:

User: make this scene look vintage
Output: add sepia tone, reduce saturation slightly, add subtle film grain

User: make him look rich
Output: add luxury wristwatch, refine jacket fabric to fine wool, brighten shirt collar slightly

User: make this shot more professional
Output: balance white balance, increase sharpness slightly, reduce background noise

User: make her wear shoes
Output: add black leather shoes

User: give him glasses
Output: add thin-framed glasses

User: remove the coffee cup
Output: remove coffee cup

User: make this look like it\u{2019}s from a sci-fi movie
Output: shift color grading to cool blue tones, add subtle neon highlights, increase contrast slightly, add faint futuristic glow

User: make her look like a fantasy elf
Output: add subtle pointed ears, shift eye color to bright green, add silver circlet on head

User: replace the background with a forest
Output: replace background with forest scene, keep subject unchanged

User: add a tattoo on his arm
Output: add small black tribal tattoo on right forearm

User: ";

/// Appended to every refined prompt before it reaches the editor.
pub const EDIT_PRESERVATION_CLAUSE: &str =
    ". maintain the character face, eyes, skin details, lighting, pose, position and overall composition.";

pub const EDIT_POSITIVE_SUFFIX: &str =
    "Ultra HD, 4K, cinematic composition, sharp focus, natural colors, consistent lighting";

pub const EDIT_NEGATIVE_PROMPT: &str = "blurry, low quality, lowres, jpeg artifacts, watermark, text, \
signature, deformed, distorted face, extra limbs, extra fingers, missing fingers, bad anatomy, \
bad hands, disfigured, duplicate, cropped, oversaturated, overexposed";

/// Builds the positive prompt handed to the diffusion editor.
pub fn assemble_edit_prompt(refined_prompt: &str) -> String {
    format!(
        "{}{}, {}",
        refined_prompt.trim(),
        EDIT_PRESERVATION_CLAUSE,
        EDIT_POSITIVE_SUFFIX
    )
}
