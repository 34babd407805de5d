// Automated cart abandonment recovery with AI personalization
use crate::ai::DecisionGateway;
use crate::events::{names, Event};
use crate::store::{CartStatus, CartStore, EmailSender, ProductStore, UserStore};
use crate::workflow::EventSink;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

const VIEWED_ITEMS_LIMIT: usize = 3;

/// Subject and body produced fresh for a single send.
#[derive(Debug, Clone)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
}

fn fallback_subject(user_name: &str) -> String {
    format!("Hey {user_name}, your cart is waiting!")
}

fn fallback_body(user_name: &str, cart_products: &str) -> String {
    format!(
        "Hi {user_name},\n\n\
         We noticed you left some items in your cart: {cart_products}\n\n\
         These popular items won't last long! Complete your purchase now before they're gone.\n\n\
         [Complete My Purchase]\n\n\
         Thanks,\n\
         Your E-commerce Team"
    )
}

fn email_prompt(
    user_name: &str,
    cart_products: &str,
    viewed_items: &[String],
    cart_value: f64,
) -> String {
    let viewed = if viewed_items.is_empty() {
        "N/A".to_string()
    } else {
        viewed_items.join(", ")
    };
    format!(
        "Write a friendly, personalized cart abandonment email for an e-commerce customer.\n\n\
         Customer name: {user_name}\n\
         Items in cart: {cart_products}\n\
         Cart value: ${cart_value:.2}\n\
         Recently viewed: {viewed}\n\n\
         Requirements:\n\
         - Warm, conversational tone (not salesy or pushy)\n\
         - Remind them about their cart items\n\
         - If they viewed other items, subtly mention them as recommendations\n\
         - Include urgency (limited stock or sale ending) but naturally\n\
         - End with clear call-to-action to complete purchase\n\
         - Keep it concise (3-4 short paragraphs max)\n\n\
         Format as JSON with keys: \"subject\" and \"body\""
    )
}

/// Rebuilds an abandoned cart's contents and sends a recovery email. The
/// trigger arrives on a delay from the workflow engine, so the cart may have
/// been checked out in the meantime.
pub struct CartAbandonmentEngine {
    users: Arc<dyn UserStore>,
    carts: Arc<dyn CartStore>,
    products: Arc<dyn ProductStore>,
    gateway: Arc<dyn DecisionGateway>,
    mailer: Arc<dyn EmailSender>,
    sink: Arc<dyn EventSink>,
}

impl CartAbandonmentEngine {
    pub fn new(
        users: Arc<dyn UserStore>,
        carts: Arc<dyn CartStore>,
        products: Arc<dyn ProductStore>,
        gateway: Arc<dyn DecisionGateway>,
        mailer: Arc<dyn EmailSender>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            users,
            carts,
            products,
            gateway,
            mailer,
            sink,
        }
    }

    /// Main abandonment workflow. Safe to re-enter: completed and emptied
    /// carts are skipped, so a retried trigger sends at most one email.
    pub async fn process_abandoned_cart(&self, user_id: u64, cart_id: u64) {
        let user = match self.users.user(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(target: "cart", user_id, cart_id, "user not found, skipping abandonment email");
                return;
            }
            Err(e) => {
                error!(target: "cart", user_id, error = %e, "user lookup failed");
                return;
            }
        };

        let cart = match self.carts.cart(cart_id).await {
            Ok(Some(cart)) => cart,
            Ok(None) => {
                warn!(target: "cart", user_id, cart_id, "cart not found, skipping abandonment email");
                return;
            }
            Err(e) => {
                error!(target: "cart", cart_id, error = %e, "cart lookup failed");
                return;
            }
        };

        if cart.items.is_empty() || cart.status == CartStatus::Completed {
            info!(target: "cart", cart_id, "cart already completed or empty, skipping");
            return;
        }

        let item_names = cart.item_names();
        let cart_value = cart.total_value();

        let viewed_items = match self
            .products
            .recently_viewed(user_id, VIEWED_ITEMS_LIMIT)
            .await
        {
            Ok(items) => items,
            Err(e) => {
                error!(target: "cart", user_id, error = %e, "failed to fetch viewed items");
                Vec::new()
            }
        };

        let content = self
            .generate_email(&user.display_name(), &item_names, &viewed_items, cart_value)
            .await;

        match self.mailer.send(&user.email, &content.subject, &content.body).await {
            Ok(()) => info!(target: "cart", to = %user.email, "cart abandonment email sent"),
            Err(e) => {
                error!(target: "cart", to = %user.email, error = %e, "failed to send abandonment email")
            }
        }

        let event = Event::new(
            names::CART_ABANDONMENT_EMAIL_SENT,
            json!({
                "user_id": user_id,
                "cart_id": cart_id,
                "cart_value": cart_value,
                "items_count": item_names.len(),
            }),
        );
        self.sink.publish(&event).await;

        info!(target: "cart", user_id, cart_id, "cart abandonment workflow completed");
    }

    /// Personalized email with a deterministic template fallback. An email
    /// always comes back; personalization quality is secondary to sending
    /// one at all.
    pub async fn generate_email(
        &self,
        user_name: &str,
        cart_items: &[String],
        viewed_items: &[String],
        cart_value: f64,
    ) -> EmailContent {
        let cart_products = if cart_items.is_empty() {
            "some great items".to_string()
        } else {
            cart_items.join(", ")
        };

        let prompt = email_prompt(user_name, &cart_products, viewed_items, cart_value);
        match self.gateway.quick_analysis(&prompt).await {
            Ok(text) => match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(parsed) => EmailContent {
                    // Partial objects fall back per field.
                    subject: parsed
                        .get("subject")
                        .and_then(|v| v.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| fallback_subject(user_name)),
                    body: parsed
                        .get("body")
                        .and_then(|v| v.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| fallback_body(user_name, &cart_products)),
                },
                Err(_) => {
                    warn!(
                        target: "cart",
                        "AI returned invalid JSON for abandonment email, using template"
                    );
                    EmailContent {
                        subject: fallback_subject(user_name),
                        body: fallback_body(user_name, &cart_products),
                    }
                }
            },
            Err(e) => {
                error!(
                    target: "cart",
                    error = %e,
                    "AI email generation unavailable, using template"
                );
                EmailContent {
                    subject: fallback_subject(user_name),
                    body: fallback_body(user_name, &cart_products),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_body_names_customer_and_items() {
        let body = fallback_body("Dana", "Starter Kit, Pro Kit");
        assert!(body.contains("Dana"));
        assert!(body.contains("Starter Kit, Pro Kit"));
        assert!(body.contains("[Complete My Purchase]"));
    }

    #[test]
    fn prompt_reports_missing_views_as_na() {
        let prompt = email_prompt("Dana", "Starter Kit", &[], 19.99);
        assert!(prompt.contains("Recently viewed: N/A"));
        assert!(prompt.contains("$19.99"));
    }
}
