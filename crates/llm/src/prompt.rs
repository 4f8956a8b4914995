const PROMPT_INTRO: &str = "You are an intelligent assistant specialized in extracting structured \
information from raw OCR receipt text.\n\nHere is the receipt text:";

const PROMPT_SCHEMA_AND_RULES: &str = r#"Your response must be ONLY valid JSON and nothing else. Do not explain anything or include comments.

Return a JSON object with the following format:
{
  "Date": "YYYY-MM-DD",
  "Description": [
    {
      "item": "<item name>",
      "amount": <amount>
    }
  ],
  "Total_Amount": <total_price>
}

Notes:
- Only include actual purchased items in the "Description". Do not include "Subtotal", "Total", "GST", etc.
- Group related words like "Large Meat Supreme" into one item if appropriate.
- Use your best judgment to clean up OCR noise (e.g. '@ $10.90' should just be 10.90).
- The amount should be a float without a dollar sign.
- Do not repeat the subtotal, tax, or total as items.
- Output only a single valid JSON object and nothing else.
- If the date or amount is missing or unclear, indicate "N/A".
- If a specific item description is not clear, use a general description like "Various Groceries".
- If multiple lines describe one item, combine them into a single entry. Only use the final listed price shown for the item. Do not split prices or infer sub-prices."#;

/// Embed OCR text into the fixed extraction instruction template.
///
/// Deterministic: the output varies only with `ocr_text`. Callers must
/// short-circuit empty input before building a prompt — an empty receipt
/// text makes the model invent data.
pub fn build_prompt(ocr_text: &str) -> String {
    format!("{PROMPT_INTRO}\n---\n{ocr_text}\n---\n\n{PROMPT_SCHEMA_AND_RULES}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeds_text_between_delimiters() {
        let prompt = build_prompt("STARBUCKS\nCoffee 4.50");
        assert!(prompt.contains("---\nSTARBUCKS\nCoffee 4.50\n---"));
    }

    #[test]
    fn states_the_output_schema() {
        let prompt = build_prompt("x");
        assert!(prompt.contains("\"Date\""));
        assert!(prompt.contains("\"Description\""));
        assert!(prompt.contains("\"Total_Amount\""));
    }

    #[test]
    fn carries_the_extraction_rules() {
        let prompt = build_prompt("x");
        assert!(prompt.contains("Do not include \"Subtotal\""));
        assert!(prompt.contains("Do not split prices or infer sub-prices"));
        assert!(prompt.contains("indicate \"N/A\""));
        assert!(prompt.contains("Various Groceries"));
        assert!(prompt.contains("Output only a single valid JSON object"));
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(build_prompt("abc"), build_prompt("abc"));
    }
}
