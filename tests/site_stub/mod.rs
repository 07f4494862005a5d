use std::sync::mpsc;
use std::thread;
use std::time::Duration;

pub const CAMERAS_HTML: &str = r#"<!doctype html>
<html>
  <head><title>Vintage Cameras | Shop</title></head>
  <body>
    <nav><a href="/">Home</a> <a href="/about">About us</a></nav>
    <article>
      <h1>Vintage Cameras</h1>
      <p>Our vintage camera collection includes rare polaroid models and a vintage camera strap for every collector.</p>
      <p>Every vintage camera is cleaned and tested before it ships. Read the <a href="/blog/lenses">lens buying guide</a> before you choose.</p>
      <p>Questions about film stock? Visit <a href="https://film.example/">the film shop</a> for expert advice.</p>
    </article>
    <footer>Copyright vintage camera shop</footer>
  </body>
</html>
"#;

const LENSES_HTML: &str = r#"<!doctype html>
<html>
  <head><title>Lens Buying Guide</title></head>
  <body>
    <article>
      <p>Picking lenses for a vintage camera takes patience, so start with the <a href="/blog/cameras">camera catalogue</a> first.</p>
      <p>Prime lenses are sharper than zoom lenses at the same price point and weigh far less.</p>
    </article>
  </body>
</html>
"#;

const FILM_HTML: &str = r#"<!doctype html>
<html>
  <head><title>Film Photography Basics</title></head>
  <body>
    <article>
      <p>Loading film into a vintage camera is easier than most beginners expect it to be.</p>
      <p>See <a href="/blog/cameras#top">our cameras</a> and the <a href="/missing">old archive</a> for more.</p>
    </article>
  </body>
</html>
"#;

const ABOUT_HTML: &str = r#"<!doctype html>
<html>
  <head><title>About</title></head>
  <body>
    <article>
      <p>We are a small team restoring classic photography equipment since 1998.</p>
      <p><a href="/blog/film">Film basics</a> and <a href="/logo.png">our logo</a>.</p>
    </article>
  </body>
</html>
"#;

const HOME_HTML: &str = r#"<!doctype html>
<html>
  <head><title>Home</title></head>
  <body>
    <article>
      <p>Welcome to the shop. Browse <a href="/blog/cameras">cameras</a> or <a href="/about">about us</a>.</p>
    </article>
  </body>
</html>
"#;

const TRIPODS_HTML: &str = r#"<!doctype html>
<html>
  <head><title>Tripods for Film Shooters</title></head>
  <body>
    <article>
      <p>A steady tripod keeps a vintage camera still during long exposures at dusk.</p>
      <p>Aluminium legs are cheaper, carbon legs are lighter, and both fold down small.</p>
    </article>
  </body>
</html>
"#;

/// A small site: `/blog/cameras` is the page under analysis, `/blog/lenses`
/// and `/blog/film` link back to it, `/missing` is a 404. `/blog/tripods` is
/// only listed in the sitemap, which `robots.txt` points at.
pub struct SiteStub {
    pub base_url: String,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SiteStub {
    pub fn spawn() -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start site stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let robots = format!("User-agent: *\nDisallow: /cart\nSitemap: {base_url}/sitemap.xml\n");
        let sitemap_index = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <sitemapindex xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n\
             <sitemap><loc>{base_url}/sitemap-pages.xml</loc></sitemap>\n\
             </sitemapindex>\n"
        );
        let sitemap_pages = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n\
             <url><loc>{base_url}/blog/cameras</loc><lastmod>2024-03-01</lastmod></url>\n\
             <url><loc>{base_url}/blog/lenses</loc></url>\n\
             <url><loc>{base_url}/blog/tripods</loc></url>\n\
             <url><loc>{base_url}/logo.png</loc></url>\n\
             <url><loc>https://film.example/</loc></url>\n\
             </urlset>\n"
        );

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let url = request.url().to_string();
                let path = url.split(['?', '#']).next().unwrap_or(&url);

                let html = "text/html; charset=utf-8";
                let xml = "application/xml";
                let (status, content_type, body): (u16, &str, &[u8]) = match path {
                    "/" => (200, html, HOME_HTML.as_bytes()),
                    "/blog/cameras" => (200, html, CAMERAS_HTML.as_bytes()),
                    "/blog/lenses" => (200, html, LENSES_HTML.as_bytes()),
                    "/blog/film" => (200, html, FILM_HTML.as_bytes()),
                    "/blog/tripods" => (200, html, TRIPODS_HTML.as_bytes()),
                    "/about" => (200, html, ABOUT_HTML.as_bytes()),
                    "/logo.png" => (200, "image/png", &[137, 80, 78, 71]),
                    "/robots.txt" => (200, "text/plain", robots.as_bytes()),
                    "/sitemap.xml" => (200, xml, sitemap_index.as_bytes()),
                    "/sitemap-pages.xml" => (200, xml, sitemap_pages.as_bytes()),
                    _ => (404, "text/plain", b"not found"),
                };

                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes())
                        .expect("build header");
                let response = tiny_http::Response::from_data(body.to_vec())
                    .with_status_code(status)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    #[allow(dead_code)]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Drop for SiteStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
