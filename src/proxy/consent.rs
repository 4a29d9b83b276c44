//! Asking the citizen before releasing attributes.

use std::fmt::Write as _;
use log::{debug, info, warn};
use url::Url;
use crate::commons::ProxyResult;
use crate::commons::error::Error;
use crate::constants::CONSENT_ENDPOINT;
use crate::light::{LightRequest, LightResponse};
use super::ProxyService;


//------------ ConsentView ---------------------------------------------------

/// The data shown on the consent page.
#[derive(Clone, Debug)]
pub struct ConsentView {
    /// The token referencing the pending identity.
    pub token: String,

    /// The service provider asking, if it told us its name.
    pub provider_name: Option<String>,

    pub level_of_assurance: Option<String>,

    /// Friendly names and values of the attributes to be released.
    pub attributes: Vec<(String, Vec<String>)>,
}

impl ConsentView {
    pub fn new(
        token: String, request: &LightRequest, response: &LightResponse
    ) -> Self {
        ConsentView {
            token,
            provider_name: request.provider_name.clone(),
            level_of_assurance: response.level_of_assurance.clone(),
            attributes: response.attributes.iter().map(|attr| {
                (attr.definition.friendly_name.clone(), attr.values.clone())
            }).collect(),
        }
    }

    /// Renders the consent page.
    pub fn render_html(&self) -> String {
        let mut rows = String::new();
        for (name, values) in &self.attributes {
            let _ = writeln!(
                rows,
                "      <tr><th>{}</th><td>{}</td></tr>",
                escape_html(name),
                escape_html(&values.join(", "))
            );
        }
        let requester = self.provider_name.as_deref().unwrap_or(
            "A service provider"
        );
        let loa = match &self.level_of_assurance {
            Some(loa) => format!(
                "  <p>Level of assurance: {}</p>\n", escape_html(loa)
            ),
            None => String::new(),
        };

        format!(
            "<!DOCTYPE html>\n\
             <html>\n\
             <head><meta charset=\"utf-8\"><title>Consent</title></head>\n\
             <body>\n\
             \x20 <p>{} requests the following information about you.</p>\n\
             {}\
             \x20 <table>\n{}  </table>\n\
             \x20 <form method=\"get\" action=\"{}\">\n\
             \x20   <input type=\"hidden\" name=\"token\" value=\"{}\">\n\
             \x20   <button type=\"submit\" name=\"cancel\" value=\"false\">Accept</button>\n\
             \x20   <button type=\"submit\" name=\"cancel\" value=\"true\">Cancel</button>\n\
             \x20 </form>\n\
             </body>\n\
             </html>\n",
            escape_html(requester),
            loa,
            rows,
            CONSENT_ENDPOINT,
            escape_html(&self.token),
        )
    }
}

fn escape_html(s: &str) -> String {
    let mut res = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => res.push_str("&amp;"),
            '<' => res.push_str("&lt;"),
            '>' => res.push_str("&gt;"),
            '"' => res.push_str("&quot;"),
            '\'' => res.push_str("&#39;"),
            _ => res.push(ch),
        }
    }
    res
}


//------------ ProxyService: consent -----------------------------------------

impl ProxyService {
    /// Processes the citizen's answer on the consent page.
    ///
    /// Returns the URL at the node to send the browser to.
    pub async fn handle_consent(
        &self, token: &str, cancel: bool
    ) -> ProxyResult<Url> {
        let reference = self.consent_codec.decode(token).map_err(|err| {
            debug!("Rejecting consent token: {err}");
            Error::bad_request("Invalid token")
        })?;
        let entry = self.pending_consents.get_and_remove(
            &reference.id
        ).await?.ok_or_else(|| Error::bad_request("Invalid token"))?;

        if entry.token_id != reference.id {
            warn!(
                "Pending consent stored as {} claims to be {}",
                reference.id, entry.token_id
            );
            return Err(Error::illegal_state("consent token mismatch"))
        }

        let response = entry.identity_response;
        if cancel {
            return Err(Error::request_denied(
                "User canceled the authentication process",
                response.in_response_to_id,
                response.relay_state,
            ))
        }

        info!(
            "Citizen consented to releasing attributes for request {}",
            response.in_response_to_id
        );
        self.deliver(response).await
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::{
        AttributeDefinition, PersonType, ResponseAttribute, Status,
    };

    fn response() -> LightResponse {
        LightResponse {
            id: "_resp".into(),
            in_response_to_id: "_req".into(),
            issuer: "proxy".into(),
            status: Status::success(),
            relay_state: None,
            subject: Some("EE/CA/60001019906".into()),
            subject_name_id_format: None,
            level_of_assurance: Some(
                "http://eidas.europa.eu/LoA/high".into()
            ),
            attributes: vec![ResponseAttribute::new(
                AttributeDefinition::new(
                    "http://eidas.europa.eu/attributes/naturalperson/CurrentFamilyName",
                    "FamilyName",
                    PersonType::NaturalPerson,
                ),
                "O'Connor <script>",
            )],
        }
    }

    fn request() -> LightRequest {
        LightRequest {
            id: "_req".into(),
            issuer: "node".into(),
            citizen_country_code: "EE".into(),
            sp_country_code: Some("CA".into()),
            sp_type: Some("public".into()),
            name_id_format: None,
            level_of_assurance: "http://eidas.europa.eu/LoA/high".into(),
            provider_name: Some("Tax & Customs".into()),
            relay_state: None,
            requested_attributes: Vec::new(),
        }
    }

    #[test]
    fn consent_page_escapes_values() {
        let view = ConsentView::new("dG9rZW4=".into(), &request(), &response());
        let html = view.render_html();
        assert!(html.contains("Tax &amp; Customs requests"));
        assert!(html.contains("O&#39;Connor &lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("action=\"Consent\""));
        assert!(html.contains("name=\"token\" value=\"dG9rZW4=\""));
        assert!(html.contains("Level of assurance: http://eidas.europa.eu/LoA/high"));
    }

    #[test]
    fn consent_page_without_provider_name() {
        let mut request = request();
        request.provider_name = None;
        let view = ConsentView::new("abc".into(), &request, &response());
        assert_eq!(view.attributes.len(), 1);
        assert!(view.render_html().contains("A service provider requests"));
    }
}
