//! Integration tests for the resumable downloader

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use shipit_net::{fingerprint, DownloadManager, NetClient};
    use tempfile::tempdir;

    fn manager(root: &std::path::Path) -> DownloadManager {
        DownloadManager::new(root, NetClient::with_defaults().unwrap())
    }

    #[tokio::test]
    async fn plain_download_writes_body_and_record() {
        let server = MockServer::start();
        let content = b"update archive bytes";
        let mock = server.mock(|when, then| {
            when.method(GET).path("/update.zip");
            then.status(200)
                .header("etag", "\"v1\"")
                .header("content-length", content.len().to_string())
                .body(content);
        });

        let temp = tempdir().unwrap();
        let downloads = temp.path().join("downloads");
        let result = manager(&downloads)
            .download(&server.url("/update.zip"))
            .await
            .unwrap();

        mock.assert();
        let body = tokio::fs::read(&result.path).await.unwrap();
        assert_eq!(body, content);
        assert_eq!(result.headers["etag"], "\"v1\"");

        let fp = fingerprint("GET", &server.url("/update.zip"));
        assert!(downloads.join(format!("{fp}.meta")).exists());
        assert!(downloads.join(format!("{fp}.part")).exists());
    }

    #[tokio::test]
    async fn no_etag_means_no_record() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/update.zip");
            then.status(200).body("no validator here");
        });

        let temp = tempdir().unwrap();
        let downloads = temp.path().join("downloads");
        manager(&downloads)
            .download(&server.url("/update.zip"))
            .await
            .unwrap();

        let fp = fingerprint("GET", &server.url("/update.zip"));
        assert!(!downloads.join(format!("{fp}.meta")).exists());
        assert!(downloads.join(format!("{fp}.part")).exists());
    }

    #[tokio::test]
    async fn resumes_partial_download_with_matching_etag() {
        let server = MockServer::start();
        let full = b"0123456789abcdef";
        let tail = &full[6..];

        let resume_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/update.zip")
                .header("range", "bytes=6-")
                .header("if-range", "\"v1\"");
            then.status(206)
                .header("etag", "\"v1\"")
                .header("content-length", tail.len().to_string())
                .body(tail);
        });

        let temp = tempdir().unwrap();
        let downloads = temp.path().join("downloads");
        let mgr = manager(&downloads);

        // Seed the partial file and its record as a crashed download left
        // them: six bytes on disk, metadata with the validator.
        let url = server.url("/update.zip");
        let fp = fingerprint("GET", &url);
        tokio::fs::create_dir_all(&downloads).await.unwrap();
        tokio::fs::write(downloads.join(format!("{fp}.part")), &full[..6])
            .await
            .unwrap();
        let record = shipit_net::DownloadRecord {
            request_url: url.clone(),
            response_headers: [
                ("etag".to_string(), "\"v1\"".to_string()),
                ("content-length".to_string(), full.len().to_string()),
            ]
            .into_iter()
            .collect(),
            file_path: downloads.join(format!("{fp}.part")),
        };
        shipit_state::envelope::write_record(
            &downloads.join(format!("{fp}.meta")),
            shipit_state::RECORD_VERSION,
            &record,
        )
        .await
        .unwrap();

        let result = mgr.download(&url).await.unwrap();

        resume_mock.assert();
        let body = tokio::fs::read(&result.path).await.unwrap();
        assert_eq!(body, full);
    }

    #[tokio::test]
    async fn changed_etag_truncates_and_refetches() {
        let server = MockServer::start();
        let new_content = b"entirely new content";

        // If-Range with a stale validator: the server ignores the range and
        // sends the new entity in full.
        let mock = server.mock(|when, then| {
            when.method(GET).path("/update.zip").header_exists("if-range");
            then.status(200)
                .header("etag", "\"v2\"")
                .header("content-length", new_content.len().to_string())
                .body(new_content);
        });

        let temp = tempdir().unwrap();
        let downloads = temp.path().join("downloads");
        let mgr = manager(&downloads);

        let url = server.url("/update.zip");
        let fp = fingerprint("GET", &url);
        tokio::fs::create_dir_all(&downloads).await.unwrap();
        tokio::fs::write(downloads.join(format!("{fp}.part")), b"stale")
            .await
            .unwrap();
        let record = shipit_net::DownloadRecord {
            request_url: url.clone(),
            response_headers: [
                ("etag".to_string(), "\"v1\"".to_string()),
                ("content-length".to_string(), "999".to_string()),
            ]
            .into_iter()
            .collect(),
            file_path: downloads.join(format!("{fp}.part")),
        };
        shipit_state::envelope::write_record(
            &downloads.join(format!("{fp}.meta")),
            shipit_state::RECORD_VERSION,
            &record,
        )
        .await
        .unwrap();

        let result = mgr.download(&url).await.unwrap();

        mock.assert();
        let body = tokio::fs::read(&result.path).await.unwrap();
        assert_eq!(body, new_content);
        assert_eq!(result.headers["etag"], "\"v2\"");
    }

    #[tokio::test]
    async fn completed_download_revalidates_with_one_request() {
        let server = MockServer::start();
        let content = b"full body";

        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/update.zip")
                .matches(|req| {
                    req.headers.as_ref().is_none_or(|headers| {
                        !headers
                            .iter()
                            .any(|(name, _)| name.eq_ignore_ascii_case("if-none-match"))
                    })
                });
            then.status(200)
                .header("etag", "\"v1\"")
                .header("content-length", content.len().to_string())
                .body(content);
        });
        let revalidate = server.mock(|when, then| {
            when.method(GET)
                .path("/update.zip")
                .header("if-none-match", "\"v1\"");
            then.status(304).header("etag", "\"v1\"");
        });

        let temp = tempdir().unwrap();
        let downloads = temp.path().join("downloads");
        let mgr = manager(&downloads);
        let url = server.url("/update.zip");

        let a = mgr.download(&url).await.unwrap();
        let b = mgr.download(&url).await.unwrap();

        first.assert();
        revalidate.assert();
        assert_eq!(
            tokio::fs::read(&a.path).await.unwrap(),
            tokio::fs::read(&b.path).await.unwrap()
        );
    }

    #[tokio::test]
    async fn range_not_satisfiable_restarts_from_zero() {
        let server = MockServer::start();
        let content = b"fresh start";

        server.mock(|when, then| {
            when.method(GET).path("/update.zip").header_exists("range");
            then.status(416);
        });
        let full_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/update.zip")
                .matches(|req| {
                    req.headers.as_ref().is_none_or(|headers| {
                        !headers
                            .iter()
                            .any(|(name, _)| name.eq_ignore_ascii_case("range"))
                    })
                });
            then.status(200).header("etag", "\"v3\"").body(content);
        });

        let temp = tempdir().unwrap();
        let downloads = temp.path().join("downloads");
        let mgr = manager(&downloads);

        let url = server.url("/update.zip");
        let fp = fingerprint("GET", &url);
        tokio::fs::create_dir_all(&downloads).await.unwrap();
        tokio::fs::write(downloads.join(format!("{fp}.part")), b"old partial")
            .await
            .unwrap();
        let record = shipit_net::DownloadRecord {
            request_url: url.clone(),
            response_headers: [
                ("etag".to_string(), "\"v1\"".to_string()),
                ("content-length".to_string(), "9999".to_string()),
            ]
            .into_iter()
            .collect(),
            file_path: downloads.join(format!("{fp}.part")),
        };
        shipit_state::envelope::write_record(
            &downloads.join(format!("{fp}.meta")),
            shipit_state::RECORD_VERSION,
            &record,
        )
        .await
        .unwrap();

        let result = mgr.download(&url).await.unwrap();

        full_mock.assert();
        assert_eq!(tokio::fs::read(&result.path).await.unwrap(), content);
    }

    #[tokio::test]
    async fn clear_all_removes_records_and_partials() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/update.zip");
            then.status(200).header("etag", "\"v1\"").body("bytes");
        });

        let temp = tempdir().unwrap();
        let downloads = temp.path().join("downloads");
        let mgr = manager(&downloads);
        mgr.download(&server.url("/update.zip")).await.unwrap();

        mgr.clear_all().await.unwrap();

        let mut entries = tokio::fs::read_dir(&downloads).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn http_error_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/update.zip");
            then.status(404);
        });

        let temp = tempdir().unwrap();
        let result = manager(&temp.path().join("downloads"))
            .download(&server.url("/update.zip"))
            .await;
        assert!(result.is_err());
    }
}
