//! nginx server block rendering
//!
//! [`render`] is a pure function of the routing record and base domain, so
//! re-rendering an unchanged container produces byte-identical output.

use crate::certs::CertificateBundle;
use crate::route::RoutingRecord;

/// Port the upstream container listens on
const UPSTREAM_PORT: u16 = 80;

/// Render the config file content for one routing record
pub fn render(routing: &RoutingRecord, base_domain: &str) -> String {
    let mut out = String::new();
    if let Some(ref tls) = routing.tls {
        https_block(&mut out, routing, tls);
        out.push('\n');
    }
    http_block(&mut out, routing, base_domain);
    out
}

/// `server_name` entries of the plain HTTP block
fn http_server_names(routing: &RoutingRecord, base_domain: &str) -> Vec<String> {
    let canonical = routing.canonical_name(base_domain);
    let mut names: Vec<String> = routing
        .server_names
        .iter()
        .filter(|name| **name != canonical)
        .cloned()
        .collect();
    names.push(canonical);
    names
}

fn https_block(out: &mut String, routing: &RoutingRecord, tls: &CertificateBundle) {
    out.push_str("server {\n");
    out.push_str("  listen 443 ssl;\n");
    out.push_str(&format!("  server_name {};\n", tls.hostname));
    out.push_str(&format!(
        "  ssl_certificate {};\n",
        tls.cert_path().display()
    ));
    out.push_str(&format!(
        "  ssl_certificate_key {};\n",
        tls.key_path().display()
    ));
    proxy_location(out, &routing.upstream_target);
    out.push_str("}\n");
}

fn http_block(out: &mut String, routing: &RoutingRecord, base_domain: &str) {
    out.push_str("server {\n");
    out.push_str("  listen 80;\n");
    out.push_str(&format!(
        "  server_name {};\n",
        http_server_names(routing, base_domain).join(" ")
    ));
    if let Some(ref tls) = routing.tls {
        out.push_str(&format!("  if ($host = {}) {{\n", tls.hostname));
        out.push_str("    return 301 https://$host$request_uri;\n");
        out.push_str("  }\n");
    }
    proxy_location(out, &routing.upstream_target);
    out.push_str("}\n");
}

fn proxy_location(out: &mut String, upstream: &str) {
    out.push_str("  location / {\n");
    out.push_str(&format!(
        "    proxy_pass http://{}:{};\n",
        upstream, UPSTREAM_PORT
    ));
    out.push_str("    proxy_set_header Host $host;\n");
    out.push_str("    proxy_set_header X-Real-IP $remote_addr;\n");
    out.push_str("    proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;\n");
    out.push_str("    proxy_set_header X-Forwarded-Proto $scheme;\n");
    out.push_str("  }\n");
}
