/// Longest store-information document, in characters
pub const MAX_SECTION_CHARS: usize = 500;

/// Store information used when no file is configured
pub const DEFAULT_STORE_INFO: &str = "\
Store Hours:
Monday to Friday: 8:00 AM - 8:00 PM
Saturday to Sunday: 9:00 AM - 9:00 PM
Holidays: 10:00 AM - 6:00 PM

Contact Information:
Phone and email are listed on the Contact page of our website.
Visit the store counter for walk-in enquiries during store hours.

Special Services:
- Custom cake orders (minimum 2 days advance notice)
- Birthday party catering available
- Wedding cake consultations by appointment
- Gluten-free options available on request
- Vegan desserts available

Delivery Information:
- Free delivery for orders above ₹500
- Delivery available within a 10km radius
- Same-day delivery for orders placed before 12 PM
- Orders are usually delivered within 30-45 minutes of confirmation

Payment Methods Accepted:
- Cash on Delivery
- UPI (Google Pay, PhonePe, Paytm)
- Credit/Debit Cards
- Net Banking

Special Offers:
- 10% discount on orders above ₹1000
- Buy 5 cupcakes, get 1 free
- Birthday month special: 15% off on custom cakes

About Us:
We are a neighbourhood bakery specialising in artisanal breads, custom cakes
and pastries. Everything is freshly baked with natural ingredients and no
preservatives, and the price on the menu is the final price.

Our Specialties:
- Custom Designer Cakes
- French Macarons
- Artisan Sourdough Bread
- Handcrafted Chocolates
- Fresh Croissants Daily
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSection {
    pub title: String,
    pub text: String,
}

/// Split store information into titled sections.
///
/// Sections are separated by blank lines. A first line ending in `:` names the
/// section; untitled sections are numbered. Sections over [`MAX_SECTION_CHARS`]
/// are cut on line boundaries, keeping an over-long single line whole.
#[inline]
pub fn split_sections(text: &str) -> Vec<StoreSection> {
    let mut sections = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    let mut untitled = 0;

    let mut flush = |block: &mut Vec<&str>, sections: &mut Vec<StoreSection>| {
        if block.is_empty() {
            return;
        }

        let title = match block[0].trim().strip_suffix(':') {
            Some(title) if !title.trim().is_empty() => title.trim().to_string(),
            _ => {
                untitled += 1;
                format!("Section {untitled}")
            }
        };

        for text in pack_lines(block, MAX_SECTION_CHARS) {
            sections.push(StoreSection {
                title: title.clone(),
                text,
            });
        }
        block.clear();
    };

    for line in text.lines() {
        if line.trim().is_empty() {
            flush(&mut block, &mut sections);
        } else {
            block.push(line.trim_end());
        }
    }
    flush(&mut block, &mut sections);

    sections
}

fn pack_lines(lines: &[&str], limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in lines {
        let line_len = line.chars().count();
        if !current.is_empty() && current_len + 1 + line_len > limit {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
