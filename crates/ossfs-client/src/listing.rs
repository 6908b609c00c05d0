//! Paginated listing as a lazy stream
//!
//! Each page is requested only when the previous one has been consumed, and
//! only with that page's continuation token.

use crate::{
    types::{ListObjectsRequest, ListingPage},
    OssClient, Result,
};
use futures::{stream, Stream, TryStreamExt};

async fn next_page(
    client: &OssClient,
    bucket: &str,
    state: Option<ListObjectsRequest>,
) -> Result<Option<(ListingPage, Option<ListObjectsRequest>)>> {
    let Some(request) = state else {
        return Ok(None);
    };

    let page = client.list_objects(bucket, &request).await?;
    let next = match (&page.next_continuation_token, page.is_truncated) {
        (Some(token), true) => Some(request.with_continuation_token(token.clone())),
        _ => None,
    };
    Ok(Some((page, next)))
}

impl OssClient {
    /// Stream every page of a listing
    ///
    /// The stream ends after the first page that is not truncated, or right
    /// after the first error.
    pub fn list_all<'a>(
        &'a self,
        bucket: &'a str,
        request: ListObjectsRequest,
    ) -> impl Stream<Item = Result<ListingPage>> + Send + 'a {
        stream::try_unfold(Some(request), move |state| next_page(self, bucket, state))
    }
}

/// Drain a listing stream into one page holding every object and prefix
pub async fn collect_listing<S>(pages: S) -> Result<ListingPage>
where
    S: Stream<Item = Result<ListingPage>>,
{
    pages
        .try_fold(ListingPage::default(), |mut all, page| async move {
            all.objects.extend(page.objects);
            all.prefixes.extend(page.prefixes);
            Ok(all)
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        testing::{test_client, ScriptedTransport},
        transport::HttpResponse,
        ClientError,
    };
    use futures::StreamExt;

    const PAGE_ONE: &str = "<ListBucketResult>\
        <IsTruncated>true</IsTruncated>\
        <NextContinuationToken>token-1</NextContinuationToken>\
        <Contents><Key>a.txt</Key><Size>1</Size></Contents>\
        <Contents><Key>b.txt</Key><Size>2</Size></Contents>\
        </ListBucketResult>";
    const PAGE_TWO: &str = "<ListBucketResult>\
        <IsTruncated>false</IsTruncated>\
        <Contents><Key>c.txt</Key><Size>3</Size></Contents>\
        <CommonPrefixes><Prefix>dir/</Prefix></CommonPrefixes>\
        </ListBucketResult>";

    #[tokio::test]
    async fn test_two_pages() {
        let transport = ScriptedTransport::new(vec![
            HttpResponse::new(200, PAGE_ONE),
            HttpResponse::new(200, PAGE_TWO),
        ]);
        let client = test_client(transport.clone());

        let all = collect_listing(client.list_all("test-bucket", ListObjectsRequest::new()))
            .await
            .unwrap();

        let keys: Vec<&str> = all.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["a.txt", "b.txt", "c.txt"]);
        assert_eq!(all.prefixes, vec!["dir/".to_string()]);
        assert!(!all.is_truncated);
        assert_eq!(all.next_continuation_token, None);

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(!requests[0].url.contains("continuation-token"));
        assert!(requests[1].url.ends_with("&continuation-token=token-1"));
    }

    #[tokio::test]
    async fn test_pages_are_requested_lazily() {
        let transport = ScriptedTransport::new(vec![
            HttpResponse::new(200, PAGE_ONE),
            HttpResponse::new(200, PAGE_TWO),
        ]);
        let client = test_client(transport.clone());

        let pages = client.list_all("test-bucket", ListObjectsRequest::new());
        futures::pin_mut!(pages);

        let first = pages.next().await.unwrap().unwrap();
        assert_eq!(first.objects.len(), 2);
        assert_eq!(transport.requests().len(), 1);

        let second = pages.next().await.unwrap().unwrap();
        assert_eq!(second.objects.len(), 1);
        assert!(pages.next().await.is_none());
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_stream_ends_after_error() {
        let transport = ScriptedTransport::new(vec![
            HttpResponse::new(200, PAGE_ONE),
            HttpResponse::new(200, "<ListBucketResult>"),
            HttpResponse::new(200, PAGE_TWO),
        ]);
        let client = test_client(transport.clone());

        let results: Vec<_> = client
            .list_all("test-bucket", ListObjectsRequest::new())
            .collect()
            .await;
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ClientError::Parse(_))));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_request_fields_are_kept() {
        let transport = ScriptedTransport::new(vec![
            HttpResponse::new(200, PAGE_ONE),
            HttpResponse::new(200, PAGE_TWO),
        ]);
        let client = test_client(transport.clone());

        let request = ListObjectsRequest::new().with_prefix("logs/").with_max_keys(2);
        collect_listing(client.list_all("test-bucket", request)).await.unwrap();

        for request in transport.requests() {
            assert!(request.url.contains("max-keys=2&prefix=logs%2F"));
        }
    }
}
